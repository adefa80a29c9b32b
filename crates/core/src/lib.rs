pub mod bill;
pub mod money;
pub mod payment;
pub mod period;
pub mod text;

pub use bill::{
    BillCandidate, BillId, LineItem, NewBill, PaymentIdentity, PaymentStatus, StoredBill,
    UtilityBillCandidate,
};
pub use money::Money;
pub use payment::PaymentQrPayload;
pub use period::DateRange;
