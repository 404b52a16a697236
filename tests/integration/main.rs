//! Integration tests: the batch loop against an in-process TCP server.

mod mock_server;
