pub mod branch;
pub mod client;
pub mod expense;
pub mod identity;
pub mod job_order;
pub mod material;
pub mod record;
pub mod technician;
