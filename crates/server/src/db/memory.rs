//! In-memory implementation of every repository port.
//!
//! Mirrors the `PostgreSQL` constraints that services rely on (unique
//! phones, device ids and tokens, one unused OTP per phone, one active
//! release per platform, one rating per recipe and device) so service and
//! HTTP tests exercise the same conflict paths without a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use pantry_core::{
    AnswerId, AppVersionId, CartId, CartProductId, ColorId, DeviceId, DevicePlatform,
    DeviceToken, IngredientId, Measurement, OtpId, Phone, ProductId, QuestionId, RatingId,
    RecipeId, UserId, VoteId,
};

use super::app_versions::AppVersionRepository;
use super::carts::CartRepository;
use super::catalog::CatalogRepository;
use super::devices::{DEVICE_ID_UNIQUE, DEVICE_TOKEN_UNIQUE, DeviceRepository};
use super::otps::OtpRepository;
use super::ratings::{RATING_UNIQUE, RatingRepository};
use super::tokens::RevokedTokenRepository;
use super::users::{PHONE_UNIQUE, USERNAME_UNIQUE, UserRepository};
use super::votes::VoteRepository;
use super::{RepositoryError, StoreHealth};
use crate::models::{
    Answer, AppVersion, Cart, CartPatch, CartProduct, CartProductPatch, Color, Device,
    DeviceStatistics, Ingredient, NewAppVersion, NewCartProduct, NewDevice, NewUser, PhoneOtp,
    ProfileUpdate, Rating, Recipe, User, Vote,
};

struct CartRecord {
    id: CartId,
    device_id: DeviceId,
    title: String,
    color_id: ColorId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct RatingRecord {
    id: RatingId,
    recipe_id: RecipeId,
    device_id: DeviceId,
    rating: i16,
    created_at: DateTime<Utc>,
}

struct VoteRecord {
    id: VoteId,
    answer_id: AnswerId,
    question_id: QuestionId,
    device_id: DeviceId,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: BTreeMap<UserId, User>,
    devices: BTreeMap<DeviceId, Device>,
    otps: BTreeMap<OtpId, PhoneOtp>,
    app_versions: BTreeMap<AppVersionId, AppVersion>,
    carts: BTreeMap<CartId, CartRecord>,
    cart_products: BTreeMap<CartProductId, CartProduct>,
    colors: BTreeMap<ColorId, Color>,
    products: BTreeSet<ProductId>,
    recipes: BTreeMap<RecipeId, Recipe>,
    ingredients: BTreeMap<IngredientId, Ingredient>,
    answers: BTreeMap<AnswerId, Answer>,
    ratings: BTreeMap<RatingId, RatingRecord>,
    votes: BTreeMap<VoteId, VoteRecord>,
    revoked: HashMap<Uuid, DateTime<Utc>>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn cart(&self, record: &CartRecord) -> Cart {
        let lines = self
            .cart_products
            .values()
            .filter(|p| p.cart_id == record.id);
        let (mut total, mut completed) = (0_i64, 0_i64);
        for line in lines {
            total += 1;
            if line.is_completed {
                completed += 1;
            }
        }

        Cart {
            id: record.id,
            device_id: record.device_id,
            owner_user_id: self.devices.get(&record.device_id).and_then(|d| d.user_id),
            title: record.title.clone(),
            color_id: record.color_id,
            color_code: self
                .colors
                .get(&record.color_id)
                .map(|c| c.code.clone())
                .unwrap_or_default(),
            completed_products: completed,
            total_products: total,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    fn rating(&self, record: &RatingRecord) -> Rating {
        Rating {
            id: record.id,
            recipe_id: record.recipe_id,
            recipe_title: self
                .recipes
                .get(&record.recipe_id)
                .map(|r| r.title.clone())
                .unwrap_or_default(),
            device_id: record.device_id,
            owner_user_id: self.devices.get(&record.device_id).and_then(|d| d.user_id),
            rating: record.rating,
            created_at: record.created_at,
        }
    }

    fn vote(&self, record: &VoteRecord) -> Vote {
        Vote {
            id: record.id,
            answer_id: record.answer_id,
            question_id: record.question_id,
            device_id: record.device_id,
            owner_user_id: self.devices.get(&record.device_id).and_then(|d| d.user_id),
            created_at: record.created_at,
        }
    }

    fn refresh_average(&mut self, recipe: RecipeId) {
        let ratings: Vec<f64> = self
            .ratings
            .values()
            .filter(|r| r.recipe_id == recipe)
            .map(|r| f64::from(r.rating))
            .collect();
        let average = if ratings.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let count = ratings.len() as f64;
            ratings.iter().sum::<f64>() / count
        };
        if let Some(r) = self.recipes.get_mut(&recipe) {
            r.avg_rating = average;
        }
    }

    fn deactivate_platform(&mut self, platform: DevicePlatform, keep: Option<AppVersionId>) {
        for version in self.app_versions.values_mut() {
            if version.platform == platform && version.is_active && Some(version.id) != keep {
                version.is_active = false;
                version.force_update = false;
            }
        }
    }
}

/// Shared in-memory tables behind every repository trait.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make health probes fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn seed_color(&self, title: &str, code: &str) -> ColorId {
        let mut t = self.lock();
        let id = ColorId::new(t.next_id());
        t.colors.insert(
            id,
            Color {
                id,
                title: title.to_owned(),
                code: code.to_owned(),
            },
        );
        id
    }

    pub fn seed_product(&self) -> ProductId {
        let mut t = self.lock();
        let id = ProductId::new(t.next_id());
        t.products.insert(id);
        id
    }

    pub fn seed_recipe(&self, title: &str) -> RecipeId {
        let mut t = self.lock();
        let id = RecipeId::new(t.next_id());
        t.recipes.insert(
            id,
            Recipe {
                id,
                title: title.to_owned(),
                avg_rating: 0.0,
            },
        );
        id
    }

    pub fn seed_ingredient(
        &self,
        recipe: RecipeId,
        product: ProductId,
        quantity: i32,
        measurement: Measurement,
    ) -> IngredientId {
        let mut t = self.lock();
        let id = IngredientId::new(t.next_id());
        t.ingredients.insert(
            id,
            Ingredient {
                id,
                recipe_id: recipe,
                product_id: product,
                quantity,
                measurement,
            },
        );
        id
    }

    pub fn seed_question(&self) -> QuestionId {
        let mut t = self.lock();
        QuestionId::new(t.next_id())
    }

    pub fn seed_answer(&self, question: QuestionId, title: &str) -> AnswerId {
        let mut t = self.lock();
        let id = AnswerId::new(t.next_id());
        t.answers.insert(
            id,
            Answer {
                id,
                question_id: question,
                title: title.to_owned(),
            },
        );
        id
    }

    /// Unused OTP rows currently stored for `phone`.
    #[must_use]
    pub fn unused_otp_count(&self, phone: &Phone) -> usize {
        self.lock()
            .otps
            .values()
            .filter(|o| &o.phone == phone && !o.used)
            .count()
    }

    /// Every OTP row for `phone`, used or not.
    #[must_use]
    pub fn otps_for(&self, phone: &Phone) -> Vec<PhoneOtp> {
        self.lock()
            .otps
            .values()
            .filter(|o| &o.phone == phone)
            .cloned()
            .collect()
    }

    /// Number of cart lines across all carts.
    #[must_use]
    pub fn cart_product_count(&self) -> usize {
        self.lock().cart_products.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn get_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| &u.phone == phone)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut t = self.lock();
        if t.users.values().any(|u| u.phone == user.phone) {
            return Err(RepositoryError::Conflict(PHONE_UNIQUE.to_owned()));
        }
        if t.users.values().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict(USERNAME_UNIQUE.to_owned()));
        }

        let now = Utc::now();
        let id = UserId::new(t.next_id());
        let user = User {
            id,
            phone: user.phone,
            username: user.username,
            password_hash: user.password_hash,
            first_name: String::new(),
            last_name: String::new(),
            surname: String::new(),
            gender: None,
            birthday: None,
            is_active: user.is_active,
            is_admin: user.is_admin,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn activate(&self, id: UserId, now: DateTime<Utc>) -> Result<User, RepositoryError> {
        let mut t = self.lock();
        let user = t.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.is_active = true;
        user.last_login = Some(now);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let mut t = self.lock();
        let user = t.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        hash.clone_into(&mut user.password_hash);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let mut t = self.lock();
        let user = t.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(first_name) = &update.first_name {
            first_name.clone_into(&mut user.first_name);
        }
        if let Some(last_name) = &update.last_name {
            last_name.clone_into(&mut user.last_name);
        }
        if let Some(surname) = &update.surname {
            surname.clone_into(&mut user.surname);
        }
        if update.gender.is_some() {
            user.gender = update.gender;
        }
        if update.birthday.is_some() {
            user.birthday = update.birthday;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<User, RepositoryError> {
        let mut t = self.lock();
        let user = t.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.is_admin = is_admin;
        user.is_active = true;
        Ok(user.clone())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepositoryError> {
        let skip = usize::try_from(offset).unwrap_or(0);
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .lock()
            .users
            .values()
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeviceRepository for MemoryStore {
    async fn create(
        &self,
        device: &NewDevice,
        token: &DeviceToken,
    ) -> Result<Device, RepositoryError> {
        let mut t = self.lock();
        if t.devices.values().any(|d| d.device_token == *token) {
            return Err(RepositoryError::Conflict(DEVICE_TOKEN_UNIQUE.to_owned()));
        }
        if t.devices.values().any(|d| d.device_id == device.device_id) {
            return Err(RepositoryError::Conflict(DEVICE_ID_UNIQUE.to_owned()));
        }

        let now = Utc::now();
        let id = DeviceId::new(t.next_id());
        let device = Device {
            id,
            device_token: token.clone(),
            device_id: device.device_id.clone(),
            platform: device.platform,
            device_model: device.device_model.clone(),
            operation_version: device.operation_version.clone(),
            ip_address: device.ip_address.clone(),
            app_version_id: device.app_version_id,
            push_token: device.push_token.clone(),
            language: device.language,
            theme: device.theme,
            is_active: true,
            logged_out_at: None,
            last_login: None,
            user_id: None,
            created_at: now,
            updated_at: now,
        };
        t.devices.insert(id, device.clone());
        Ok(device)
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Device>, RepositoryError> {
        Ok(self
            .lock()
            .devices
            .values()
            .find(|d| d.device_token.as_str() == token)
            .cloned())
    }

    async fn get_by_id(&self, id: DeviceId) -> Result<Option<Device>, RepositoryError> {
        Ok(self.lock().devices.get(&id).cloned())
    }

    async fn bind_user(
        &self,
        id: DeviceId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Device, RepositoryError> {
        let mut t = self.lock();
        let device = t.devices.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        device.user_id = Some(user);
        device.is_active = true;
        device.logged_out_at = None;
        device.last_login = Some(now);
        device.updated_at = Utc::now();
        Ok(device.clone())
    }

    async fn logout(&self, id: DeviceId, now: DateTime<Utc>) -> Result<Device, RepositoryError> {
        let mut t = self.lock();
        let device = t.devices.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        device.is_active = false;
        device.logged_out_at.get_or_insert(now);
        device.updated_at = Utc::now();
        Ok(device.clone())
    }

    async fn logout_all_for_user(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut t = self.lock();
        let mut count = 0;
        for device in t.devices.values_mut() {
            if device.user_id == Some(user) && device.is_active {
                device.is_active = false;
                device.logged_out_at = Some(now);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Device>, RepositoryError> {
        Ok(self
            .lock()
            .devices
            .values()
            .filter(|d| d.user_id == Some(user))
            .cloned()
            .collect())
    }

    async fn latest_for_user(&self, user: UserId) -> Result<Option<Device>, RepositoryError> {
        Ok(self
            .lock()
            .devices
            .values()
            .filter(|d| d.user_id == Some(user))
            .max_by_key(|d| (d.last_login, d.id))
            .cloned())
    }

    async fn statistics(&self) -> Result<DeviceStatistics, RepositoryError> {
        let t = self.lock();
        let mut stats = DeviceStatistics::default();
        for device in t.devices.values() {
            stats.all += 1;
            match device.platform {
                DevicePlatform::Android => stats.android += 1,
                DevicePlatform::Ios => stats.ios += 1,
                DevicePlatform::All => {}
            }
            if device.is_active {
                stats.online += 1;
            } else {
                stats.offline += 1;
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl OtpRepository for MemoryStore {
    async fn replace_unused(
        &self,
        phone: &Phone,
        code: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<PhoneOtp, RepositoryError> {
        let mut t = self.lock();
        t.otps.retain(|_, o| !(&o.phone == phone && !o.used));

        let id = OtpId::new(t.next_id());
        let otp = PhoneOtp {
            id,
            phone: phone.clone(),
            code: code.to_owned(),
            created_at,
            expires_at,
            attempts: 0,
            used: false,
        };
        t.otps.insert(id, otp.clone());
        Ok(otp)
    }

    async fn latest_unused(&self, phone: &Phone) -> Result<Option<PhoneOtp>, RepositoryError> {
        Ok(self
            .lock()
            .otps
            .values()
            .filter(|o| &o.phone == phone && !o.used)
            .max_by_key(|o| (o.created_at, o.id))
            .cloned())
    }

    async fn delete(&self, id: OtpId) -> Result<(), RepositoryError> {
        self.lock().otps.remove(&id);
        Ok(())
    }

    async fn reserve_attempt(
        &self,
        id: OtpId,
        max_attempts: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let mut t = self.lock();
        Ok(t
            .otps
            .get_mut(&id)
            .filter(|otp| !otp.used && otp.attempts < max_attempts)
            .map(|otp| {
                otp.attempts += 1;
                otp.attempts
            }))
    }

    async fn mark_used(&self, id: OtpId) -> Result<bool, RepositoryError> {
        let mut t = self.lock();
        match t.otps.get_mut(&id) {
            Some(otp) if !otp.used => {
                otp.used = true;
                otp.attempts = (otp.attempts - 1).max(0);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl AppVersionRepository for MemoryStore {
    async fn get(&self, id: AppVersionId) -> Result<Option<AppVersion>, RepositoryError> {
        Ok(self.lock().app_versions.get(&id).cloned())
    }

    async fn create(&self, version: &NewAppVersion) -> Result<AppVersion, RepositoryError> {
        let mut t = self.lock();
        if version.is_active {
            t.deactivate_platform(version.platform, None);
        }

        let id = AppVersionId::new(t.next_id());
        let version = AppVersion {
            id,
            version: version.version.clone(),
            platform: version.platform,
            is_active: version.is_active,
            force_update: version.force_update,
            description: version.description.clone(),
            created_at: Utc::now(),
        };
        t.app_versions.insert(id, version.clone());
        Ok(version)
    }

    async fn activate(&self, id: AppVersionId) -> Result<AppVersion, RepositoryError> {
        let mut t = self.lock();
        let platform = t
            .app_versions
            .get(&id)
            .map(|v| v.platform)
            .ok_or(RepositoryError::NotFound)?;
        t.deactivate_platform(platform, Some(id));

        let version = t.app_versions.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        version.is_active = true;
        Ok(version.clone())
    }

    async fn active_for(
        &self,
        platform: DevicePlatform,
    ) -> Result<Option<AppVersion>, RepositoryError> {
        Ok(self
            .lock()
            .app_versions
            .values()
            .find(|v| v.platform == platform && v.is_active)
            .cloned())
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn list_visible(
        &self,
        device: DeviceId,
        user: Option<UserId>,
    ) -> Result<Vec<Cart>, RepositoryError> {
        let t = self.lock();
        Ok(t.carts
            .values()
            .filter(|c| {
                c.device_id == device
                    || user.is_some_and(|u| {
                        t.devices.get(&c.device_id).and_then(|d| d.user_id) == Some(u)
                    })
            })
            .map(|c| t.cart(c))
            .collect())
    }

    async fn get(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let t = self.lock();
        Ok(t.carts.get(&id).map(|c| t.cart(c)))
    }

    async fn get_many(&self, ids: &[CartId]) -> Result<Vec<Cart>, RepositoryError> {
        let t = self.lock();
        Ok(t.carts
            .values()
            .filter(|c| ids.contains(&c.id))
            .map(|c| t.cart(c))
            .collect())
    }

    async fn create(
        &self,
        device: DeviceId,
        title: &str,
        color: ColorId,
    ) -> Result<Cart, RepositoryError> {
        let mut t = self.lock();
        let now = Utc::now();
        let id = CartId::new(t.next_id());
        let record = CartRecord {
            id,
            device_id: device,
            title: title.to_owned(),
            color_id: color,
            created_at: now,
            updated_at: now,
        };
        let cart = t.cart(&record);
        t.carts.insert(id, record);
        Ok(cart)
    }

    async fn update(&self, id: CartId, patch: &CartPatch) -> Result<Cart, RepositoryError> {
        let mut t = self.lock();
        let record = t.carts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(title) = &patch.title {
            title.clone_into(&mut record.title);
        }
        if let Some(color) = patch.color_id {
            record.color_id = color;
        }
        record.updated_at = Utc::now();

        let record = t.carts.get(&id).ok_or(RepositoryError::NotFound)?;
        Ok(t.cart(record))
    }

    async fn delete(&self, id: CartId) -> Result<(), RepositoryError> {
        let mut t = self.lock();
        t.carts.remove(&id);
        t.cart_products.retain(|_, p| p.cart_id != id);
        Ok(())
    }

    async fn list_products(&self, cart: CartId) -> Result<Vec<CartProduct>, RepositoryError> {
        Ok(self
            .lock()
            .cart_products
            .values()
            .filter(|p| p.cart_id == cart)
            .cloned()
            .collect())
    }

    async fn add_product(
        &self,
        cart: CartId,
        product: &NewCartProduct,
    ) -> Result<CartProduct, RepositoryError> {
        let mut t = self.lock();
        let id = CartProductId::new(t.next_id());
        let line = CartProduct {
            id,
            cart_id: cart,
            product_id: product.product_id,
            quantity: product.quantity,
            measurement: product.measurement,
            is_completed: false,
        };
        t.cart_products.insert(id, line.clone());
        Ok(line)
    }

    async fn get_product(
        &self,
        cart: CartId,
        id: CartProductId,
    ) -> Result<Option<CartProduct>, RepositoryError> {
        Ok(self
            .lock()
            .cart_products
            .get(&id)
            .filter(|p| p.cart_id == cart)
            .cloned())
    }

    async fn update_product(
        &self,
        id: CartProductId,
        patch: &CartProductPatch,
    ) -> Result<CartProduct, RepositoryError> {
        let mut t = self.lock();
        let line = t.cart_products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(quantity) = patch.quantity {
            line.quantity = quantity;
        }
        if let Some(measurement) = patch.measurement {
            line.measurement = measurement;
        }
        if let Some(completed) = patch.is_completed {
            line.is_completed = completed;
        }
        Ok(line.clone())
    }

    async fn delete_product(&self, id: CartProductId) -> Result<(), RepositoryError> {
        self.lock().cart_products.remove(&id);
        Ok(())
    }

    async fn toggle_completed(&self, id: CartProductId) -> Result<bool, RepositoryError> {
        let mut t = self.lock();
        let line = t.cart_products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        line.is_completed = !line.is_completed;
        Ok(line.is_completed)
    }

    async fn add_products_bulk(
        &self,
        lines: &[(CartId, NewCartProduct)],
    ) -> Result<u64, RepositoryError> {
        let mut t = self.lock();
        if lines.iter().any(|(cart, _)| !t.carts.contains_key(cart)) {
            return Err(RepositoryError::NotFound);
        }

        for (cart, product) in lines {
            let id = CartProductId::new(t.next_id());
            t.cart_products.insert(
                id,
                CartProduct {
                    id,
                    cart_id: *cart,
                    product_id: product.product_id,
                    quantity: product.quantity,
                    measurement: product.measurement,
                    is_completed: false,
                },
            );
        }
        Ok(lines.len() as u64)
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn color(&self, id: ColorId) -> Result<Option<Color>, RepositoryError> {
        Ok(self.lock().colors.get(&id).cloned())
    }

    async fn product_exists(&self, id: ProductId) -> Result<bool, RepositoryError> {
        Ok(self.lock().products.contains(&id))
    }

    async fn recipe(&self, id: RecipeId) -> Result<Option<Recipe>, RepositoryError> {
        Ok(self.lock().recipes.get(&id).cloned())
    }

    async fn ingredients(
        &self,
        recipe: RecipeId,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, RepositoryError> {
        Ok(self
            .lock()
            .ingredients
            .values()
            .filter(|i| i.recipe_id == recipe && ids.contains(&i.id))
            .copied()
            .collect())
    }

    async fn answer(&self, id: AnswerId) -> Result<Option<Answer>, RepositoryError> {
        Ok(self.lock().answers.get(&id).cloned())
    }
}

#[async_trait]
impl RatingRepository for MemoryStore {
    async fn create(
        &self,
        recipe: RecipeId,
        device: DeviceId,
        rating: i16,
    ) -> Result<Rating, RepositoryError> {
        let mut t = self.lock();
        if t
            .ratings
            .values()
            .any(|r| r.recipe_id == recipe && r.device_id == device)
        {
            return Err(RepositoryError::Conflict(RATING_UNIQUE.to_owned()));
        }

        let id = RatingId::new(t.next_id());
        t.ratings.insert(
            id,
            RatingRecord {
                id,
                recipe_id: recipe,
                device_id: device,
                rating,
                created_at: Utc::now(),
            },
        );
        t.refresh_average(recipe);

        let record = t.ratings.get(&id).ok_or(RepositoryError::NotFound)?;
        Ok(t.rating(record))
    }

    async fn get(&self, id: RatingId) -> Result<Option<Rating>, RepositoryError> {
        let t = self.lock();
        Ok(t.ratings.get(&id).map(|r| t.rating(r)))
    }

    async fn update(&self, id: RatingId, rating: i16) -> Result<Rating, RepositoryError> {
        let mut t = self.lock();
        let record = t.ratings.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.rating = rating;
        let recipe = record.recipe_id;
        t.refresh_average(recipe);

        let record = t.ratings.get(&id).ok_or(RepositoryError::NotFound)?;
        Ok(t.rating(record))
    }

    async fn delete(&self, id: RatingId) -> Result<(), RepositoryError> {
        let mut t = self.lock();
        if let Some(record) = t.ratings.remove(&id) {
            t.refresh_average(record.recipe_id);
        }
        Ok(())
    }
}

#[async_trait]
impl VoteRepository for MemoryStore {
    async fn cast(
        &self,
        answer: AnswerId,
        question: QuestionId,
        device: DeviceId,
    ) -> Result<Vote, RepositoryError> {
        let mut t = self.lock();
        t.votes
            .retain(|_, v| !(v.question_id == question && v.device_id == device));

        let id = VoteId::new(t.next_id());
        let record = VoteRecord {
            id,
            answer_id: answer,
            question_id: question,
            device_id: device,
            created_at: Utc::now(),
        };
        let vote = t.vote(&record);
        t.votes.insert(id, record);
        Ok(vote)
    }

    async fn get(&self, id: VoteId) -> Result<Option<Vote>, RepositoryError> {
        let t = self.lock();
        Ok(t.votes.get(&id).map(|v| t.vote(v)))
    }

    async fn delete(&self, id: VoteId) -> Result<(), RepositoryError> {
        self.lock().votes.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl RevokedTokenRepository for MemoryStore {
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut t = self.lock();
        let now = Utc::now();
        t.revoked.retain(|_, expiry| *expiry >= now);
        t.revoked.entry(jti).or_insert(expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.lock().revoked.contains_key(&jti))
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::DataCorruption("store unavailable".to_owned()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pantry_core::{Language, Theme};

    fn phone() -> Phone {
        Phone::parse("+998901234567").unwrap()
    }

    fn new_device(device_id: &str) -> NewDevice {
        NewDevice {
            device_id: device_id.to_owned(),
            platform: DevicePlatform::Android,
            device_model: "Pixel 8".to_owned(),
            operation_version: "14".to_owned(),
            ip_address: "10.0.0.1".to_owned(),
            app_version_id: None,
            push_token: None,
            language: Language::default(),
            theme: Theme::default(),
        }
    }

    #[tokio::test]
    async fn replace_unused_keeps_one_live_code() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.replace_unused(&phone(), "111111", now, now).await.unwrap();
        store.replace_unused(&phone(), "222222", now, now).await.unwrap();

        assert_eq!(store.unused_otp_count(&phone()), 1);
        let latest = store.latest_unused(&phone()).await.unwrap().unwrap();
        assert_eq!(latest.code, "222222");
    }

    #[tokio::test]
    async fn duplicate_device_id_conflicts() {
        let store = MemoryStore::new();
        DeviceRepository::create(&store, &new_device("abc"), &DeviceToken::generate())
            .await
            .unwrap();
        let err = DeviceRepository::create(&store, &new_device("abc"), &DeviceToken::generate())
            .await
            .unwrap_err();

        assert!(err.is_conflict_on(DEVICE_ID_UNIQUE));
    }

    #[tokio::test]
    async fn cart_reports_current_device_owner() {
        let store = MemoryStore::new();
        let color = store.seed_color("Red", "#ff0000");
        let device = DeviceRepository::create(&store, &new_device("abc"), &DeviceToken::generate())
            .await
            .unwrap();
        let cart = CartRepository::create(&store, device.id, "Weekly", color)
            .await
            .unwrap();
        assert_eq!(cart.owner_user_id, None);
        assert_eq!(cart.color_code, "#ff0000");

        let user = UserRepository::create(
            &store,
            NewUser {
                phone: phone(),
                username: "user_abcdef".to_owned(),
                password_hash: String::new(),
                is_active: true,
                is_admin: false,
            },
        )
        .await
        .unwrap();
        store.bind_user(device.id, user.id, Utc::now()).await.unwrap();

        let cart = CartRepository::get(&store, cart.id).await.unwrap().unwrap();
        assert_eq!(cart.owner_user_id, Some(user.id));
    }

    #[tokio::test]
    async fn rating_average_follows_writes() {
        let store = MemoryStore::new();
        let recipe = store.seed_recipe("Plov");
        let a = DeviceRepository::create(&store, &new_device("a"), &DeviceToken::generate())
            .await
            .unwrap();
        let b = DeviceRepository::create(&store, &new_device("b"), &DeviceToken::generate())
            .await
            .unwrap();

        RatingRepository::create(&store, recipe, a.id, 5).await.unwrap();
        let second = RatingRepository::create(&store, recipe, b.id, 2).await.unwrap();
        let avg = store.recipe(recipe).await.unwrap().unwrap().avg_rating;
        assert!((avg - 3.5).abs() < f64::EPSILON);

        RatingRepository::delete(&store, second.id).await.unwrap();
        let avg = store.recipe(recipe).await.unwrap().unwrap().avg_rating;
        assert!((avg - 5.0).abs() < f64::EPSILON);
    }
}
