pub mod backend;
pub mod s3;

pub use backend::{ObjectHeaders, ObjectStore, RemoteState, S3Provider};
pub use s3::S3Store;
