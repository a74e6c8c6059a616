pub mod genesis;
pub mod init;
pub mod run;
