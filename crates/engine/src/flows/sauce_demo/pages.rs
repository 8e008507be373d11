//! Page objects for the Sauce Demo storefront.
//!
//! Each step borrows the page and returns the object for the page it lands
//! on, so a checkout reads as one chain from [`LoginPage`] to
//! [`CompletePage`].

use std::collections::BTreeSet;

use autosuite_core::error_code::FlowError;
use serde::Serialize;

use crate::session::Page;

pub const URL_LOGIN: &str = "https://www.saucedemo.com/";

const TITLE: &str = "span.title[data-test='title']";

const USERNAME: &str = "#user-name";
const PASSWORD: &str = "#password";
const BTN_LOGIN: &str = "#login-button";
const LOGIN_ERROR: &str = "[data-test='error']";

const INVENTORY_LIST: &str = ".inventory_list";
const CARD_NAME: &str = ".inventory_item .inventory_item_name";
const CARD_ADD_BUTTON: &str = ".inventory_item .pricebar button";
const CART_ICON: &str = ".shopping_cart_link";

const CART_ITEM_NAME: &str = ".cart_item .inventory_item_name";
const BTN_CHECKOUT: &str = "#checkout";

const FIRST_NAME: &str = "[data-test='firstName']";
const LAST_NAME: &str = "[data-test='lastName']";
const POSTAL_CODE: &str = "[data-test='postalCode']";
const BTN_CONTINUE: &str = "#continue";

const SUBTOTAL: &str = ".summary_subtotal_label";
const TAX: &str = ".summary_tax_label";
const TOTAL: &str = ".summary_total_label";
const BTN_FINISH: &str = "#finish";

const COMPLETE_HEADER: &str = "h2.complete-header";
const COMPLETE_TEXT: &str = ".complete-text";

/// Order totals exactly as the summary labels display them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub item_total: String,
    pub tax: String,
    pub grand_total: String,
}

/// Fail unless the page title reads `expected`.
async fn expect_title(page: &dyn Page, expected: &str) -> Result<(), FlowError> {
    let title = page.text(TITLE).await?;
    if title.trim() == expected {
        Ok(())
    } else {
        Err(FlowError::unknown(format!(
            "expected page '{expected}', found '{}'",
            title.trim()
        )))
    }
}

/// Names from `expected` that are not in `found`, sorted.
fn missing_names(expected: &[String], found: &[String]) -> Vec<String> {
    let found: BTreeSet<&str> = found.iter().map(|s| s.trim()).collect();
    expected
        .iter()
        .map(|s| s.trim())
        .filter(|name| !found.contains(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub struct LoginPage<'a> {
    page: &'a dyn Page,
}

impl<'a> LoginPage<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self { page }
    }

    pub async fn open(self) -> Result<Self, FlowError> {
        self.page.goto(URL_LOGIN).await?;
        self.page.wait_for(USERNAME).await?;
        Ok(self)
    }

    /// Submit credentials; the storefront's own error banner becomes the error.
    pub async fn login(self, username: &str, password: &str) -> Result<InventoryPage<'a>, FlowError> {
        self.page.fill(USERNAME, username).await?;
        self.page.fill(PASSWORD, password).await?;
        self.page.click(BTN_LOGIN).await?;

        if self.page.is_visible(LOGIN_ERROR).await? {
            let message = self.page.text(LOGIN_ERROR).await?;
            return Err(FlowError::unknown(message.trim()));
        }

        self.page.wait_for(INVENTORY_LIST).await?;
        expect_title(self.page, "Products").await?;
        Ok(InventoryPage { page: self.page })
    }
}

pub struct InventoryPage<'a> {
    page: &'a dyn Page,
}

impl<'a> InventoryPage<'a> {
    /// Click "Add to cart" on every card whose visible name is requested.
    pub async fn add_products_by_name(self, names: &[String]) -> Result<Self, FlowError> {
        let mut remaining: BTreeSet<&str> = names.iter().map(|s| s.trim()).collect();
        let cards = self.page.texts(CARD_NAME).await?;

        for (i, title) in cards.iter().enumerate() {
            if remaining.remove(title.trim()) {
                self.page.click_nth(CARD_ADD_BUTTON, i).await?;
                if remaining.is_empty() {
                    break;
                }
            }
        }

        if !remaining.is_empty() {
            return Err(FlowError::unknown(format!(
                "Can't find the inputted products: {remaining:?}"
            )));
        }
        Ok(self)
    }

    pub async fn go_to_cart(self) -> Result<CartPage<'a>, FlowError> {
        self.page.click(CART_ICON).await?;
        self.page.wait_for(BTN_CHECKOUT).await?;
        Ok(CartPage { page: self.page })
    }
}

pub struct CartPage<'a> {
    page: &'a dyn Page,
}

impl<'a> CartPage<'a> {
    pub async fn assert_contains(self, names: &[String]) -> Result<Self, FlowError> {
        let found = self.page.texts(CART_ITEM_NAME).await?;
        let missing = missing_names(names, &found);
        if !missing.is_empty() {
            return Err(FlowError::unknown(format!("Cart missing: {missing:?}")));
        }
        Ok(self)
    }

    pub async fn checkout(self) -> Result<StepOnePage<'a>, FlowError> {
        self.page.click(BTN_CHECKOUT).await?;
        self.page.wait_for(FIRST_NAME).await?;
        expect_title(self.page, "Checkout: Your Information").await?;
        Ok(StepOnePage { page: self.page })
    }
}

pub struct StepOnePage<'a> {
    page: &'a dyn Page,
}

impl<'a> StepOnePage<'a> {
    pub async fn fill_and_continue(
        self,
        first_name: &str,
        last_name: &str,
        postal_code: &str,
    ) -> Result<StepTwoPage<'a>, FlowError> {
        self.page.fill(FIRST_NAME, first_name).await?;
        self.page.fill(LAST_NAME, last_name).await?;
        self.page.fill(POSTAL_CODE, postal_code).await?;
        self.page.click(BTN_CONTINUE).await?;
        self.page.wait_for(TOTAL).await?;
        Ok(StepTwoPage { page: self.page })
    }
}

pub struct StepTwoPage<'a> {
    page: &'a dyn Page,
}

impl<'a> StepTwoPage<'a> {
    pub async fn assert_contains(self, names: &[String]) -> Result<Self, FlowError> {
        let found = self.page.texts(CART_ITEM_NAME).await?;
        let missing = missing_names(names, &found);
        if !missing.is_empty() {
            return Err(FlowError::unknown(format!("Step Two missing: {missing:?}")));
        }
        Ok(self)
    }

    pub async fn read_totals(&self) -> Result<Totals, FlowError> {
        Ok(Totals {
            item_total: self.page.text(SUBTOTAL).await?.trim().to_string(),
            tax: self.page.text(TAX).await?.trim().to_string(),
            grand_total: self.page.text(TOTAL).await?.trim().to_string(),
        })
    }

    pub async fn finish(self) -> Result<CompletePage<'a>, FlowError> {
        self.page.click(BTN_FINISH).await?;
        self.page.wait_for(COMPLETE_HEADER).await?;
        Ok(CompletePage { page: self.page })
    }
}

pub struct CompletePage<'a> {
    page: &'a dyn Page,
}

impl CompletePage<'_> {
    pub async fn assert_success(&self) -> Result<(), FlowError> {
        for selector in [COMPLETE_HEADER, COMPLETE_TEXT] {
            if !self.page.is_visible(selector).await? {
                return Err(FlowError::unknown(format!("'{selector}' is not visible")));
            }
        }
        Ok(())
    }
}
