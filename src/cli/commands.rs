use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

use crate::types::{NamespaceOrder, SortField};

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and schema
    Init,

    /// Upload a project from a JSON or YAML file
    Push {
        /// Registry path: namespace/name[:tag]
        registry_path: String,

        /// Project document (.json, .yaml or .yml)
        #[arg(long, short)]
        file: PathBuf,

        #[arg(long)]
        description: Option<String>,

        /// Hide the project from callers outside its namespace
        #[arg(long)]
        private: bool,

        /// Schema reference, e.g. "databio/pep-2.1.0"
        #[arg(long)]
        schema: Option<String>,

        /// Number of samples (counted from `_sample_dict` if omitted)
        #[arg(long)]
        samples: Option<u64>,

        /// Replace an existing project with the same key
        #[arg(long)]
        overwrite: bool,
    },

    /// Print a project as JSON
    Pull {
        registry_path: String,

        /// Print the annotation only, without the payload
        #[arg(long)]
        annotation: bool,
    },

    /// Change fields of an existing project
    Update {
        registry_path: String,

        /// Move the project to a new tag
        #[arg(long)]
        tag: Option<String>,

        /// Move the project to a new name
        #[arg(long)]
        name: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long, conflicts_with = "public")]
        private: bool,

        #[arg(long)]
        public: bool,

        #[arg(long)]
        schema: Option<String>,

        /// Replace the project document
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Copy a project to a new registry path
    Fork {
        source: String,
        target: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        private: bool,
    },

    /// Delete a project
    Rm { registry_path: String },

    /// Print the digest of a project document without storing it
    Digest {
        #[arg(long, short)]
        file: PathBuf,
    },

    /// Search project annotations
    Search {
        /// Free text matched against name, description and tag
        query: Option<String>,

        #[arg(long)]
        namespace: Option<String>,

        /// Restrict to one tag (requires --namespace)
        #[arg(long, requires = "namespace")]
        tag: Option<String>,

        /// Only projects with this digest (repeatable)
        #[arg(long = "digest")]
        digests: Vec<String>,

        /// Only these registry paths (repeatable)
        #[arg(long = "path")]
        paths: Vec<String>,

        #[arg(long, value_enum, default_value_t = SortArg::LastUpdate)]
        sort: SortArg,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, default_value_t = 0)]
        offset: u64,
    },

    /// List namespaces with project and sample counts
    Namespaces {
        query: Option<String>,

        #[arg(long, value_enum, default_value_t = NamespaceOrderArg::Name)]
        order: NamespaceOrderArg,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, default_value_t = 0)]
        offset: u64,
    },

    /// Show creation and update activity
    Stats {
        #[arg(long)]
        namespace: Option<String>,

        /// Bucket by month over three years instead of by day over three months
        #[arg(long)]
        monthly: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    LastUpdate,
    Submission,
    Name,
}

impl From<SortArg> for SortField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::LastUpdate => SortField::LastUpdateDate,
            SortArg::Submission => SortField::SubmissionDate,
            SortArg::Name => SortField::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NamespaceOrderArg {
    Name,
    Projects,
}

impl From<NamespaceOrderArg> for NamespaceOrder {
    fn from(arg: NamespaceOrderArg) -> Self {
        match arg {
            NamespaceOrderArg::Name => NamespaceOrder::Name,
            NamespaceOrderArg::Projects => NamespaceOrder::NumberOfProjects,
        }
    }
}
