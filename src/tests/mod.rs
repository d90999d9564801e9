mod account_tests;
mod extraction_tests;
mod file_service_tests;
mod gemini_tests;
mod helpers;
