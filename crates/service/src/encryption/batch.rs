//! Batching over the encryption gateway.

use tracing::warn;

use super::{CipherOp, EncryptionError, EncryptionGateway};

/// Maximum number of values per gateway round trip.
pub const BATCH_SIZE: usize = 50;

/// Output of a batched call.
///
/// `values` always has one entry per input, in input order. Positions of a
/// failed batch hold empty strings and the failure is kept in `failures`.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub values: Vec<String>,
    pub failures: Vec<EncryptionError>,
}

impl BatchOutput {
    /// Number of batches that failed.
    #[must_use]
    pub fn failed_batches(&self) -> usize {
        self.failures.len()
    }

    /// Outputs if every batch succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first batch failure.
    pub fn into_complete(self) -> Result<Vec<String>, EncryptionError> {
        match self.failures.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.values),
        }
    }
}

/// Splits inputs into gateway-sized batches.
///
/// Empty inputs are passed through as empty outputs without a round trip.
#[derive(Debug, Clone)]
pub struct BatchCipher<E> {
    gateway: E,
    batch_size: usize,
}

impl<E: EncryptionGateway> BatchCipher<E> {
    #[must_use]
    pub const fn new(gateway: E) -> Self {
        Self::with_batch_size(gateway, BATCH_SIZE)
    }

    /// Use a custom batch size. A size of zero is treated as one.
    #[must_use]
    pub const fn with_batch_size(gateway: E, batch_size: usize) -> Self {
        let batch_size = if batch_size == 0 { 1 } else { batch_size };
        Self {
            gateway,
            batch_size,
        }
    }

    pub async fn encrypt(&self, values: &[String]) -> BatchOutput {
        self.run(CipherOp::Encrypt, values).await
    }

    pub async fn decrypt(&self, values: &[String]) -> BatchOutput {
        self.run(CipherOp::Decrypt, values).await
    }

    async fn run(&self, op: CipherOp, values: &[String]) -> BatchOutput {
        let mut output = BatchOutput {
            values: vec![String::new(); values.len()],
            failures: Vec::new(),
        };

        let positions: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_empty())
            .map(|(index, _)| index)
            .collect();

        for chunk in positions.chunks(self.batch_size) {
            let batch: Vec<String> = chunk
                .iter()
                .filter_map(|&index| values.get(index).cloned())
                .collect();

            let result = match op {
                CipherOp::Encrypt => self.gateway.encrypt(&batch).await,
                CipherOp::Decrypt => self.gateway.decrypt(&batch).await,
            };

            match result {
                Ok(results) if results.len() == chunk.len() => {
                    for (&index, value) in chunk.iter().zip(results) {
                        if let Some(slot) = output.values.get_mut(index) {
                            *slot = value;
                        }
                    }
                }
                Ok(results) => {
                    let err = EncryptionError::Malformed(format!(
                        "expected {} values, got {}",
                        chunk.len(),
                        results.len()
                    ));
                    warn!(op = op.as_str(), batch = chunk.len(), error = %err, "Encryption batch failed");
                    output.failures.push(err);
                }
                Err(err) => {
                    warn!(op = op.as_str(), batch = chunk.len(), error = %err, "Encryption batch failed");
                    output.failures.push(err);
                }
            }
        }

        output
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Reverses strings; fails any call whose first value starts with `!`.
    #[derive(Default)]
    struct Reverser {
        calls: Mutex<Vec<usize>>,
    }

    impl Reverser {
        fn respond(&self, values: &[String]) -> Result<Vec<String>, EncryptionError> {
            self.calls.lock().unwrap().push(values.len());
            if values.first().is_some_and(|v| v.starts_with('!')) {
                return Err(EncryptionError::Status(503));
            }
            Ok(values.iter().map(|v| v.chars().rev().collect()).collect())
        }
    }

    impl EncryptionGateway for Reverser {
        async fn encrypt(&self, values: &[String]) -> Result<Vec<String>, EncryptionError> {
            self.respond(values)
        }

        async fn decrypt(&self, values: &[String]) -> Result<Vec<String>, EncryptionError> {
            self.respond(values)
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|&v| v.to_owned()).collect()
    }

    #[tokio::test]
    async fn test_splits_into_batches() {
        let cipher = BatchCipher::new(Reverser::default());
        let input: Vec<String> = (0..120).map(|i| format!("v{i}")).collect();

        let output = cipher.encrypt(&input).await;

        assert_eq!(output.failed_batches(), 0);
        assert_eq!(output.values.len(), 120);
        assert_eq!(output.values[119], "911v");
        assert_eq!(*cipher.gateway.calls.lock().unwrap(), vec![50, 50, 20]);
    }

    #[tokio::test]
    async fn test_failed_batch_degrades_in_place() {
        let cipher = BatchCipher::with_batch_size(Reverser::default(), 2);
        let input = strings(&["ab", "cd", "!x", "ef", "gh"]);

        let output = cipher.decrypt(&input).await;

        assert_eq!(output.values, strings(&["ba", "dc", "", "", "hg"]));
        assert_eq!(output.failed_batches(), 1);
        assert!(output.into_complete().is_err());
    }

    #[tokio::test]
    async fn test_empty_values_skip_the_gateway() {
        let cipher = BatchCipher::new(Reverser::default());
        let input = strings(&["", "12", ""]);

        let output = cipher.encrypt(&input).await;

        assert_eq!(output.into_complete().unwrap(), strings(&["", "21", ""]));
        assert_eq!(*cipher.gateway.calls.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_no_values_no_calls() {
        let cipher = BatchCipher::new(Reverser::default());
        let output = cipher.decrypt(&[]).await;
        assert!(output.values.is_empty());
        assert!(cipher.gateway.calls.lock().unwrap().is_empty());
    }
}
