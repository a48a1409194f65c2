// Single-statement repository functions are generic over
// `E: Executor<'e, Database = Postgres>` so they accept both a `&PgPool`
// (direct query) and a `&mut Transaction` (atomic operations). Multi-statement
// operations take `&mut PgConnection` and are meant to run inside a
// transaction the caller owns.

pub mod case;
pub mod notification;
pub mod payment;
pub mod progress;
pub mod subscription;
