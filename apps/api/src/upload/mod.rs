// Upload intake: reading the multipart body and enforcing the upload rules
// before anything touches the staging directory.

pub mod multipart;
pub mod validation;
