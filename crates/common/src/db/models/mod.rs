//! SeaORM entity models
//!
//! Database entities for the result store

mod notification;
mod result;
mod semester;
mod student;
mod subject;
mod upload_log;

pub use student::{
    ActiveModel as StudentActiveModel,
    Column as StudentColumn,
    Entity as StudentEntity,
    Model as Student,
};

pub use semester::{
    ActiveModel as SemesterActiveModel,
    Column as SemesterColumn,
    Entity as SemesterEntity,
    Model as Semester,
};

pub use subject::{
    ActiveModel as SubjectActiveModel,
    Column as SubjectColumn,
    Entity as SubjectEntity,
    Model as Subject,
};

pub use result::{
    ActiveModel as ResultActiveModel,
    Column as ResultColumn,
    Entity as ResultEntity,
    Model as ResultModel,
    ResultStatus,
};

pub use upload_log::{
    ActiveModel as UploadLogActiveModel,
    Column as UploadLogColumn,
    Entity as UploadLogEntity,
    Model as UploadLog,
    UploadStatus,
};

pub use notification::{
    ActiveModel as NotificationActiveModel,
    Column as NotificationColumn,
    Entity as NotificationEntity,
    Model as Notification,
    NotificationLevel,
};
