//! Database entities.

pub mod comment;
pub mod following;
pub mod group_chat;
pub mod group_member;
pub mod group_message;
pub mod message;
pub mod notification;
pub mod post;
pub mod post_like;
pub mod stored_file;
pub mod user;

pub use comment::Entity as Comment;
pub use following::Entity as Following;
pub use group_chat::Entity as GroupChat;
pub use group_member::Entity as GroupMember;
pub use group_message::Entity as GroupMessage;
pub use message::Entity as Message;
pub use notification::Entity as Notification;
pub use post::Entity as Post;
pub use post_like::Entity as PostLike;
pub use stored_file::Entity as StoredFile;
pub use user::Entity as User;
