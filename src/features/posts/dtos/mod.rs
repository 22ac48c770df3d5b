mod post_dto;

pub use post_dto::{PostDetailDto, PostInput, PostResponseDto};
