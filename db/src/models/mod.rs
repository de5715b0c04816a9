pub mod attendance_record;
pub mod checkin_token;
pub mod course;
pub mod session;
pub mod user;
