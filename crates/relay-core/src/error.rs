use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Session registry at capacity ({0} sessions)")]
    RegistryFull(usize),
}
