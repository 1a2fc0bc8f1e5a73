/// Errors of the host-privileged control surface (table creation and the
/// userspace mapping). Never surfaced to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The LIOBN is already registered on this guest.
    Busy,
    /// Page store allocation failed.
    NoMem,
    /// Malformed creation request.
    Invalid,
    /// Mapping fault outside the page store. The faulting thread gets
    /// SIGBUS; -EFAULT only stands in where a caller needs an errno.
    BusError,
}

pub const EBUSY: isize = 16;
pub const ENOMEM: isize = 12;
pub const EINVAL: isize = 22;
pub const EFAULT: isize = 14;

impl From<Error> for isize {
    fn from(err: Error) -> Self {
        match err {
            Error::Busy => -EBUSY,
            Error::NoMem => -ENOMEM,
            Error::Invalid => -EINVAL,
            Error::BusError => -EFAULT,
        }
    }
}
