//! Subcommands of the `api-harness` binary.
//! `api-harness` 二进制文件的子命令。

pub mod init;
pub mod run;
