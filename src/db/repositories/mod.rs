pub mod alerts;
pub mod users;

pub use alerts::AlertsRepository;
pub use users::UsersRepository;
