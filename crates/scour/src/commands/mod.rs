pub mod init;
pub mod minify;
pub mod optimize;
pub mod serve;
pub mod strip;
pub mod styles;
