pub mod contact;
pub mod draft;
pub mod research;
pub mod session;
