pub mod transfer_process_repository;

pub use transfer_process_repository::SeaOrmTransferProcessRepository;
