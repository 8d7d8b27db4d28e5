//! Shared `{ "data": ... }` response envelope for operator endpoints.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
