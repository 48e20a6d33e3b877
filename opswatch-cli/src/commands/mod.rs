pub mod role_sync;
pub mod version_watch;
