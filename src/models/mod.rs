//! Data models returned by repositories and services.

pub mod accounts;
pub mod catalog;

pub use accounts::{
    ActivationToken, NewUser, NewUserProfile, PasswordResetToken, RefreshToken, Token, User,
    UserGroup, UserGroupKind, UserProfile, UserProfileUpdate, UserWithProfile,
};
pub use catalog::{
    ArticleType, AvailableFilters, CatalogPage, CategoryMenu, MasterCategory, PageInfo, Product,
    SubCategory, YearRange,
};
