//! Route handlers.
//!
//! Form posts answer with `303 See Other` and carry their outcome as a flash
//! message in the session; pages render whatever flashes are pending.

pub mod health;
pub mod login;
pub mod logout;
pub mod pages;
pub mod register;
