//! Database repositories.

mod comment;
mod following;
mod group;
mod group_message;
mod message;
mod notification;
mod post;
mod post_like;
mod stored_file;
mod user;

pub use comment::CommentRepository;
pub use following::FollowingRepository;
pub use group::GroupRepository;
pub use group_message::GroupMessageRepository;
pub use message::MessageRepository;
pub use notification::NotificationRepository;
pub use post::PostRepository;
pub use post_like::PostLikeRepository;
pub use stored_file::StoredFileRepository;
pub use user::UserRepository;
