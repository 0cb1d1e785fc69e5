pub mod anchor;
pub mod member;
pub mod product;
