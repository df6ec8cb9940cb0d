use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ethereum_types::H256;
use parking_lot::Mutex;
use rlp::RlpStream;

use crate::crypto::keccak256;
use crate::errors::{EngineError, EngineResult};

type Nodes = BTreeMap<Vec<u8>, Vec<u8>>;

/// Shared trie node store. Committed tries are addressable by their root
/// hash; `Trie::commit` stages nodes here and `persist` retains them
/// durably. The all-zero hash is the root of the empty trie.
#[derive(Clone, Default)]
pub struct TrieDb {
    store: Arc<Mutex<NodeStore>>,
}

#[derive(Default)]
struct NodeStore {
    persisted: HashMap<H256, Arc<Nodes>>,
    staged: HashMap<H256, Arc<Nodes>>,
}

impl TrieDb {
    pub fn memory() -> Self {
        Self::default()
    }

    /// Opens the trie committed under `root`. A zero root yields an empty
    /// trie; any other root must have been committed through this store.
    pub fn open_trie(&self, root: H256) -> EngineResult<Trie> {
        if root.is_zero() {
            return Ok(Trie {
                db: self.clone(),
                data: Nodes::new(),
            });
        }
        let store = self.store.lock();
        let nodes = store
            .persisted
            .get(&root)
            .or_else(|| store.staged.get(&root))
            .ok_or_else(|| EngineError::Trie(format!("missing trie node {root:?}")))?;
        Ok(Trie {
            db: self.clone(),
            data: nodes.as_ref().clone(),
        })
    }

    /// Durably retains a staged root. Roots that were never staged or
    /// persisted are rejected; persisting the empty root is a no-op.
    pub fn persist(&self, root: H256) -> EngineResult<()> {
        if root.is_zero() {
            return Ok(());
        }
        let mut store = self.store.lock();
        if store.persisted.contains_key(&root) {
            return Ok(());
        }
        match store.staged.remove(&root) {
            Some(nodes) => {
                store.persisted.insert(root, nodes);
                Ok(())
            }
            None => Err(EngineError::Trie(format!("missing trie node {root:?}"))),
        }
    }

    fn stage(&self, root: H256, nodes: Nodes) {
        if root.is_zero() {
            return;
        }
        let mut store = self.store.lock();
        if !store.persisted.contains_key(&root) {
            store.staged.insert(root, Arc::new(nodes));
        }
    }
}

/// A single Merkle trie materialized in memory. Keys iterate in
/// lexicographic order, which the prefix iterator relies on.
pub struct Trie {
    db: TrieDb,
    data: Nodes,
}

impl Trie {
    pub fn get(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        if value.is_empty() {
            self.data.remove(&key);
        } else {
            self.data.insert(key, value);
        }
    }

    /// Removing an absent key is tolerated.
    pub fn remove(&mut self, key: &[u8]) {
        self.data.remove(key);
    }

    /// Root hash of the current contents. Does not write to the store.
    pub fn hash(&self) -> H256 {
        if self.data.is_empty() {
            return H256::zero();
        }
        let mut stream = RlpStream::new();
        stream.begin_list(self.data.len());
        for (key, value) in &self.data {
            stream.begin_list(2);
            stream.append(&key.clone());
            stream.append(&value.clone());
        }
        keccak256(&stream.out())
    }

    /// Computes the root and stages the trie nodes into the backing store.
    pub fn commit(&mut self) -> EngineResult<H256> {
        let root = self.hash();
        self.db.stage(root, self.data.clone());
        Ok(root)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Vec<u8>)> {
        self.data.iter()
    }
}

/// A trie view that scopes every key with a table prefix, so one physical
/// trie could host several logical tables.
pub struct PrefixedTrie {
    prefix: Vec<u8>,
    trie: Trie,
}

impl PrefixedTrie {
    pub fn new(db: &TrieDb, root: H256, prefix: &[u8]) -> EngineResult<Self> {
        Ok(Self {
            prefix: prefix.to_vec(),
            trie: db.open_trie(root)?,
        })
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = self.prefix.clone();
        full.extend_from_slice(key);
        full
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.trie.get(&self.full_key(key)).cloned()
    }

    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        let full = self.full_key(key);
        self.trie.insert(full, value);
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.trie.remove(&self.full_key(key));
    }

    pub fn hash(&self) -> H256 {
        self.trie.hash()
    }

    pub fn commit(&mut self) -> EngineResult<H256> {
        self.trie.commit()
    }

    /// Iterates every entry of the table, keys stripped of the prefix.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + '_ {
        let prefix_len = self.prefix.len();
        self.trie
            .iter()
            .map(move |(key, value)| (key[prefix_len..].to_vec(), value.clone()))
    }

    /// Iterates only entries whose key begins with `prefix ‖ extra`. The
    /// walk stops at the first key outside the prefix instead of skipping,
    /// exploiting the trie's lexicographic order.
    pub fn prefix_iter<'a>(
        &'a self,
        extra: &[u8],
    ) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a {
        let start = self.full_key(extra);
        let prefix_len = self.prefix.len();
        self.trie
            .data
            .range(start.clone()..)
            .take_while(move |(key, _)| key.starts_with(&start))
            .map(move |(key, value)| (key[prefix_len..].to_vec(), value.clone()))
    }
}
