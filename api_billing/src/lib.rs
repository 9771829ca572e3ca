pub mod routes {
    pub mod billing;
    pub mod webhook;
}

pub mod services {
    pub mod checkout;
    pub mod reconcile;
}

pub mod dtos {
    pub mod billing;
}

pub mod models {
    pub mod event;
}

pub mod mount;
