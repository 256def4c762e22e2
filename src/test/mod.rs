
mod queue_tests;
mod session_tests;
