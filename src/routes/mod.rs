mod health_check;
mod response;
mod users;

pub use health_check::health_check;
pub use response::ApiResponse;
pub use users::{
    change_password, current_user, login, logout, refresh_token, register, ChangePasswordRequest,
    LoginRequest, RefreshRequest, RegisterForm,
};
