//! Job rows are written when the scheduler accepts a job and updated once waiting ends.
//! `clean` marks them so the same remote logs aren't removed twice.

pub mod load;
pub mod update;
