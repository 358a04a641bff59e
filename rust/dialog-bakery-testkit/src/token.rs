use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use dialog_bakery::{
    MintError, MintRequest, RootKey, Token, TokenMinter, TokenSlice, TokenVerifier,
    VerificationError,
};
use dialog_caveat::Caveat;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

fn sign(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    let mut signature = [0u8; 32];
    signature.copy_from_slice(&mac.finalize().into_bytes());
    signature
}

/// A caveat on a [`TestToken`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestCaveat {
    /// Checked by the token's own service.
    FirstParty(String),
    /// Discharged by the service at `location`.
    ThirdParty {
        /// Who discharges it.
        location: String,
        /// What they are asked to check.
        condition: String,
        /// Id the discharge token must carry.
        id: Vec<u8>,
        /// Root key of the discharge token.
        key: Vec<u8>,
    },
}

/// An HMAC-SHA256 chained token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestToken {
    id: Vec<u8>,
    location: String,
    caveats: Vec<TestCaveat>,
    signature: [u8; 32],
}

impl TestToken {
    /// A token with no caveats.
    pub fn new(root_key: &[u8], id: impl Into<Vec<u8>>, location: impl Into<String>) -> Self {
        let id = id.into();
        let signature = sign(root_key, &id);
        Self {
            id,
            location: location.into(),
            caveats: Vec::new(),
            signature,
        }
    }

    /// Location of the service that minted the token.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The caveats in the order they were added.
    pub fn caveats(&self) -> &[TestCaveat] {
        &self.caveats
    }

    /// The first party conditions in the order they were added.
    pub fn first_party_conditions(&self) -> Vec<&str> {
        self.caveats
            .iter()
            .filter_map(|caveat| match caveat {
                TestCaveat::FirstParty(condition) => Some(condition.as_str()),
                TestCaveat::ThirdParty { .. } => None,
            })
            .collect()
    }

    /// Appends a first party caveat.
    pub fn add_first_party(&mut self, condition: impl Into<String>) {
        let condition = condition.into();
        self.signature = sign(&self.signature, condition.as_bytes());
        self.caveats.push(TestCaveat::FirstParty(condition));
    }

    /// Appends a third party caveat addressed to `location`.
    pub fn add_third_party(&mut self, location: impl Into<String>, condition: impl Into<String>) {
        let location = location.into();
        let condition = condition.into();

        let mut id = Vec::with_capacity(location.len() + condition.len() + 40);
        id.extend_from_slice(location.as_bytes());
        id.push(b' ');
        id.extend_from_slice(condition.as_bytes());
        id.push(b' ');
        id.extend_from_slice(&self.caveats.len().to_be_bytes());
        id.extend_from_slice(&self.signature[..8]);

        let key = Sha256::digest(&id).to_vec();
        self.signature = sign(&self.signature, &id);
        self.caveats.push(TestCaveat::ThirdParty {
            location,
            condition,
            id,
            key,
        });
    }

    /// Appends a caveat of either kind.
    pub fn add_caveat(&mut self, caveat: &Caveat) {
        match caveat.location.as_deref() {
            Some(location) if caveat.is_third_party() => {
                self.add_third_party(location, caveat.condition.clone())
            }
            _ => self.add_first_party(caveat.condition.clone()),
        }
    }

    /// The third party caveats addressed to `location`.
    pub fn third_party_caveats(&self, location: &str) -> impl Iterator<Item = &TestCaveat> {
        self.caveats.iter().filter(move |caveat| {
            matches!(caveat, TestCaveat::ThirdParty { location: at, .. } if at == location)
        })
    }

    /// Discharges the first third party caveat addressed to `location`,
    /// attaching `caveats` to the discharge. The discharger is trusted to
    /// have checked the condition.
    pub fn discharge(&self, location: &str, caveats: &[Caveat]) -> Option<TestToken> {
        let TestCaveat::ThirdParty { id, key, .. } = self.third_party_caveats(location).next()? else {
            return None;
        };
        let mut discharge = TestToken::new(key, id.clone(), location);
        for caveat in caveats {
            discharge.add_caveat(caveat);
        }
        Some(discharge)
    }

    fn verify_chain(
        &self,
        key: &[u8],
        discharges: &[TestToken],
        depth: usize,
        conditions: &mut Vec<String>,
    ) -> Result<(), VerificationError> {
        if depth > discharges.len() {
            return Err(VerificationError::Invalid("discharge cycle".into()));
        }
        let mut signature = sign(key, &self.id);
        for caveat in &self.caveats {
            match caveat {
                TestCaveat::FirstParty(condition) => {
                    signature = sign(&signature, condition.as_bytes());
                    conditions.push(condition.clone());
                }
                TestCaveat::ThirdParty { condition, id, key, .. } => {
                    signature = sign(&signature, id);
                    let discharge = discharges
                        .iter()
                        .find(|discharge| &discharge.id == id)
                        .ok_or_else(|| VerificationError::MissingDischarge(condition.clone()))?;
                    discharge.verify_chain(key, discharges, depth + 1, conditions)?;
                }
            }
        }
        if signature != self.signature {
            return Err(VerificationError::SignatureMismatch);
        }
        Ok(())
    }
}

impl Token for TestToken {
    fn id(&self) -> &[u8] {
        &self.id
    }
}

/// Verifies and mints [`TestToken`]s, counting verifications.
#[derive(Debug, Clone, Default)]
pub struct HmacBakery {
    verifications: Arc<AtomicUsize>,
}

impl HmacBakery {
    /// A bakery with a zero verification count.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many slices have been verified so far.
    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

impl TokenVerifier<TestToken> for HmacBakery {
    fn verify(&self, slice: &TokenSlice<TestToken>, root_key: &RootKey) -> Result<Vec<String>, VerificationError> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        let mut conditions = Vec::new();
        slice
            .primary
            .verify_chain(root_key.as_bytes(), &slice.discharges, 0, &mut conditions)?;
        Ok(conditions)
    }
}

impl TokenMinter<TestToken> for HmacBakery {
    fn mint(&self, request: MintRequest<'_>) -> Result<TestToken, MintError> {
        let mut token = TestToken::new(request.root_key.as_bytes(), request.id.to_bytes(), request.location);
        for caveat in request.caveats {
            token.add_caveat(caveat);
        }
        Ok(token)
    }
}
