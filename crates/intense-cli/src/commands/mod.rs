pub mod apply;
pub mod best;
pub mod canonical;
pub mod compare;
pub mod compose;
pub mod decode;
pub mod encode;
pub mod refines;
