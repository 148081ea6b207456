pub mod capability;
pub mod completion;
pub mod data_url;
pub mod entities;
pub mod fence;
pub mod history;
pub mod sentinel;
pub mod validate;
