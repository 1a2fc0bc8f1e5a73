pub mod memory;
pub mod page;
pub mod slots;

pub use memory::{GuestMemory, HostPage, PinnedPage};
pub use page::{HeapAllocator, PageAllocator, TcePage};
pub use slots::MemorySlots;
