pub mod contents_mock;
