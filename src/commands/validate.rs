//! Validate command

use std::path::PathBuf;

use clap::Args;
use meshctl_common::crd::IstioOperator;
use meshctl_validate::{check_istio_operator, ValidationErrors};
use tracing::debug;

use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// IstioOperator YAML file
    pub file: PathBuf,

    /// Also report required fields that are not set
    #[arg(long)]
    pub check_required: bool,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)?;
    let errors = validate_document(&raw, args.check_required)?;
    if errors.is_empty() {
        println!("{} is valid", args.file.display());
        return Ok(());
    }

    println!("Validation errors:");
    for error in errors.iter() {
        println!("  - {}", error);
    }
    Err(Error::validation(format!(
        "{}: {} validation errors",
        args.file.display(),
        errors.len()
    )))
}

/// Validate one IstioOperator document. Empty documents and documents
/// without a spec have nothing to validate.
pub fn validate_document(raw: &str, check_required: bool) -> Result<ValidationErrors> {
    let doc: serde_yaml::Value = serde_yaml::from_str(raw)?;
    if doc.is_null() || doc.get("spec").map_or(true, serde_yaml::Value::is_null) {
        debug!("no spec to validate");
        return Ok(ValidationErrors::new());
    }
    let iop: IstioOperator = serde_yaml::from_value(doc)?;
    Ok(check_istio_operator(&iop, check_required))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_valid() {
        assert!(validate_document("", false).unwrap().is_empty());
        assert!(validate_document(
            "apiVersion: install.istio.io/v1alpha1\nkind: IstioOperator\nmetadata:\n  name: x\n",
            true
        )
        .unwrap()
        .is_empty());
    }

    #[test]
    fn invalid_gateway_name_is_reported() {
        let errs = validate_document(
            r#"
apiVersion: install.istio.io/v1alpha1
kind: IstioOperator
metadata:
  name: x
spec:
  components:
    egressGateways:
      - name: Invalid_Name!
"#,
            false,
        )
        .unwrap();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.iter().next().unwrap().path(), "Components.EgressGateways[0].Name");
    }

    #[test]
    fn run_fails_on_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("iop.yaml");
        std::fs::write(
            &file,
            "apiVersion: install.istio.io/v1alpha1\nkind: IstioOperator\nmetadata:\n  name: x\nspec:\n  hub: \"not a hub\"\n",
        )
        .unwrap();
        let err = run(ValidateArgs {
            file,
            check_required: false,
        })
        .unwrap_err();
        assert!(err.to_string().contains("1 validation errors"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            validate_document("spec: [unclosed", false),
            Err(Error::Yaml(_))
        ));
    }
}
