//! SeaORM entity models
//!
//! Database entities for RPMS

mod notification;
mod paper;
mod review;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use paper::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

pub use review::{
    Entity as ReviewEntity,
    Model as Review,
    ActiveModel as ReviewActiveModel,
    Column as ReviewColumn,
};

pub use notification::{
    Entity as NotificationEntity,
    Model as Notification,
    ActiveModel as NotificationActiveModel,
    Column as NotificationColumn,
};
