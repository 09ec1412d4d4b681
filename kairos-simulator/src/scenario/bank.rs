use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use kairos_core::prelude::*;

use crate::driver::Bootstrap;

/// Customers deposit into a shared proxied account, sleep a tick and then
/// withdraw increasing amounts until the account runs dry.
///
/// Customer `i` deposits 10 and asks for `10 * (i + 1)`. Deposits are
/// fire-and-forget, withdrawals block and may fail.
pub struct Bank {
    customers: u32,
    opening_balance: i64,
    ledger: Rc<RefCell<BankLedger>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankLedger {
    pub approved: Vec<u32>,
    pub declined: Vec<u32>,
    /// Balance reported by the last approved withdrawal.
    pub balance: Option<i64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("insufficient funds: balance {balance}, requested {requested}")]
pub struct InsufficientFunds {
    pub balance: i64,
    pub requested: i64,
}

impl Bank {
    pub const DEPOSIT: i64 = 10;

    pub fn new(customers: u32, opening_balance: i64) -> Self {
        Self {
            customers,
            opening_balance,
            ledger: Rc::default(),
        }
    }

    pub fn ledger(&self) -> BankLedger {
        self.ledger.borrow().clone()
    }
}

#[derive(Debug)]
struct Account {
    balance: i64,
}

struct Deposit(i64);

impl Operation for Deposit {
    type Output = ();

    fn name() -> &'static str {
        "deposit"
    }
}

struct Withdraw(i64);

impl Operation for Withdraw {
    type Output = i64;

    fn name() -> &'static str {
        "withdraw"
    }
}

impl Proxied<Deposit> for Account {
    fn invoke(&mut self, op: Deposit) -> Result<(), Failure> {
        self.balance += op.0;
        Ok(())
    }
}

impl Proxied<Withdraw> for Account {
    fn invoke(&mut self, op: Withdraw) -> Result<i64, Failure> {
        if op.0 > self.balance {
            return Err(InsufficientFunds {
                balance: self.balance,
                requested: op.0,
            }
            .into());
        }
        self.balance -= op.0;
        Ok(self.balance)
    }
}

struct Customer {
    id: u32,
    account: Ref<Proxy<Account>>,
    ledger: Rc<RefCell<BankLedger>>,
}

impl Entity for Customer {
    fn describe(&self) -> String {
        format!("customer {}", self.id)
    }
}

struct Visit;

impl Operation for Visit {
    type Output = ();

    fn name() -> &'static str {
        "visit"
    }
}

impl Handler<Visit> for Customer {
    fn handle(&mut self, _op: Visit, cx: &mut Context<'_, Self, ()>) -> Reply<()> {
        let sim = cx.sim().clone();
        let (id, account, ledger) = (self.id, self.account, self.ledger.clone());
        Reply::blocking(async move {
            sim.send(account, Deposit(Bank::DEPOSIT))?;
            sim.sleep_block(1).await?;

            let requested = Bank::DEPOSIT * (i64::from(id) + 1);
            match sim.call(account, Withdraw(requested)).await {
                Ok(balance) => {
                    let mut ledger = ledger.borrow_mut();
                    ledger.approved.push(id);
                    ledger.balance = Some(balance);
                }
                Err(failure) => {
                    let Some(declined) = failure.downcast_ref::<InsufficientFunds>() else {
                        return Err(failure);
                    };
                    sim.log(format!("customer {id}: {declined}"));
                    ledger.borrow_mut().declined.push(id);
                }
            }
            Ok(())
        })
    }
}

impl Bootstrap for Bank {
    fn name(&self) -> &str {
        "bank"
    }

    fn seed(&self, sim: &Sim) -> Result<(), Failure> {
        let interface = InterfaceDecl::new("account")
            .with(Signature::of::<Deposit>())
            .with(Signature::of::<Withdraw>().failing().blocking());
        let account = wrap(
            sim,
            Account {
                balance: self.opening_balance,
            },
            &[interface],
        )?;
        for id in 0..self.customers {
            let customer = sim.create(Customer {
                id,
                account,
                ledger: self.ledger.clone(),
            });
            sim.send(customer, Visit)?;
        }
        Ok(())
    }
}
