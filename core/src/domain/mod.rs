pub mod acl;
pub mod content;
pub mod file;
pub mod path;
pub mod profile;

pub use acl::{AclDescriptor, AclEntry, AclEntryType, AclScope, FsAction};
pub use content::{FileContent, PreviewResult};
pub use file::FileNode;
pub use profile::ConnectionProfile;
