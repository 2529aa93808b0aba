pub mod api_client;
pub mod file_tail;
pub mod local_store;
pub mod version_check;
