mod comment_dto;

pub use comment_dto::{
    CommentDetailDto, CommentListQuery, CommentResponseDto, CreateCommentDto, UpdateCommentDto,
};
