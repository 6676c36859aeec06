//! `CampusQR` CLI Library
//!
//! Terminal front-end for rotating-QR attendance. Teachers emit tokens
//! and manage lab sessions; students log in and scan.

pub mod config;
pub mod emit_cmd;
pub mod lab_cmd;
pub mod manual_cmd;
pub mod output;
pub mod scan_cmd;
pub mod student_cmd;
