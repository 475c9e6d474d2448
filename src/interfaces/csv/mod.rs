pub mod enrollment_writer;
