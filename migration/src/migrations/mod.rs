pub mod m202601150001_create_users;
pub mod m202601150002_create_courses;
pub mod m202601150003_create_sessions;
pub mod m202601150004_create_checkin_tokens;
pub mod m202601150005_create_attendance_records;
