use std::collections::TryReserveError;

/// Conditions that stop the video hardware from starting.
///
/// Nothing in here can happen once a [`Video`](crate::video::Video) has been
/// built: rendering a frame never fails.
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("no video configuration for title `{0}`")]
    UnknownTitle(String),

    #[error("graphics ROM region is empty")]
    EmptyGfxRom,

    #[error("graphics ROM region of {len} bytes is not a whole number of 8x8 tiles")]
    UndersizedGfxRom { len: usize },

    #[error("could not allocate the {what}")]
    Allocation {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },
}

/// Allocates a zero-filled buffer, reporting failure instead of aborting.
pub(crate) fn try_alloc<T: Clone + Default>(
    len: usize,
    what: &'static str,
) -> Result<Vec<T>, VideoError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|source| VideoError::Allocation { what, source })?;
    buffer.resize(len, T::default());

    Ok(buffer)
}
