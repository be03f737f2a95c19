pub mod session_file;

pub use session_file::FileSessionStorage;
