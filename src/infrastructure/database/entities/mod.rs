pub mod transfer_process;
