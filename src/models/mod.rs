pub mod event;
pub mod order;
pub mod payout;
pub mod voucher;
pub mod wallet;

pub use event::{Event, TicketType};
pub use order::{Order, OrderStatus, Payment, PaymentStatus};
pub use payout::{PayoutRequest, PayoutStatus};
pub use voucher::{Voucher, VoucherStatus, VoucherUsage};
pub use wallet::{
    HostWallet, WalletTransaction, WalletTransactionStatus, WalletTransactionType,
};
