pub mod inspect;
pub mod refresh;
